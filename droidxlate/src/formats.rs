//! On-disk resource formats.

pub mod android_strings;
