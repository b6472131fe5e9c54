//! Push orchestration
//!
//! [`Pusher::push`] resolves the source image, works out the destination and
//! either pushes once or once per tag of the image. The bytes themselves are
//! moved by a [`Copier`].

pub mod archive;
pub mod resolve;

use crate::copy::{CopyOptions, CopyRequest, Copier};
use crate::events::{Event, EventGuard, EventSink};
use crate::storage::images::{ImageLookup, LocalImage};
use crate::transport::{Transport, TransportRegistry};
use crate::{PorterError, Result};
use tracing::debug;

/// Options for a push
#[derive(Debug, Clone, Default)]
pub struct PushOptions {
    /// Push every tag of the source image instead of a single destination
    pub all_tags: bool,
    /// Forwarded to the copy engine as is
    pub copy: CopyOptions,
}

/// Pushes images from a local store through a copy engine
pub struct Pusher<'a> {
    store: &'a dyn ImageLookup,
    transports: &'a TransportRegistry,
    copier: &'a dyn Copier,
    events: Option<&'a dyn EventSink>,
    default_transport: Transport,
}

impl<'a> Pusher<'a> {
    pub fn new(
        store: &'a dyn ImageLookup,
        transports: &'a TransportRegistry,
        copier: &'a dyn Copier,
        events: Option<&'a dyn EventSink>,
    ) -> Self {
        Self {
            store,
            transports,
            copier,
            events,
            default_transport: Transport::Docker,
        }
    }

    /// Transport assumed for destinations that do not name one
    pub fn with_default_transport(mut self, transport: Transport) -> Self {
        self.default_transport = transport;
        self
    }

    /// Push `source` from the local store to `destination`.
    ///
    /// An empty destination means the name the source was found under.
    /// Returns the manifest written by a single push, and `None` when every
    /// tag was pushed.
    pub async fn push(
        &self,
        source: &str,
        destination: &str,
        options: Option<&PushOptions>,
    ) -> Result<Option<Vec<u8>>> {
        let defaults = PushOptions::default();
        let options = options.unwrap_or(&defaults);

        // Platform is ignored: push exactly what was named
        let (image, resolved_source) = self.store.lookup_image(source)?;

        // Never derive the destination from an image ID; short IDs collide
        let destination = if destination.is_empty() {
            resolved_source.as_str()
        } else {
            destination
        };

        if options.all_tags {
            self.push_all_tags(&image, destination, options)
                .await
                .map(|()| None)
        } else {
            self.push_image(&image, destination, options)
                .await
                .map(Some)
        }
    }

    /// Push every tag of `image` to `base:<tag>`, stopping at the first failure
    pub async fn push_all_tags(
        &self,
        image: &LocalImage,
        base: &str,
        options: &PushOptions,
    ) -> Result<()> {
        let repository = base
            .strip_prefix(Transport::Docker.prefix())
            .unwrap_or(base);
        if repository.contains(':') {
            return Err(PorterError::ConflictingTag(base.to_string()));
        }

        let tags = image.named_tagged_repo_tags()?;
        debug!(
            "Flag --all-tags true, found: [{}]",
            tags.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(" ")
        );

        for tag in &tags {
            let destination = format!("{}:{}", base, tag.tag());
            self.push_image(image, &destination, options).await?;
        }

        Ok(())
    }

    /// Push `image` to a single destination and return the written manifest
    pub async fn push_image(
        &self,
        image: &LocalImage,
        destination: &str,
        options: &PushOptions,
    ) -> Result<Vec<u8>> {
        let source = image.storage_reference()?;

        debug!("Pushing image {} to {}", source, destination);

        let target = resolve::resolve(self.transports, self.default_transport, destination)?
            .into_reference();

        if options.all_tags && target.transport() != Transport::Docker {
            return Err(PorterError::UnsupportedMode(format!(
                "--all-tags can only be used with the {} transport, not {}",
                Transport::Docker,
                target.transport()
            )));
        }

        // From here on the push counts as attempted, whatever the outcome
        let _event = EventGuard::new(self.events, Event::image_push(image.id(), destination));

        let request = CopyRequest {
            options: &options.copy,
            archive_tags: archive::preserved_tags(destination, &target),
        };

        self.copier.copy(&source, &target, &request).await
    }
}
