//! Image references and manifest formats

pub mod oci;
