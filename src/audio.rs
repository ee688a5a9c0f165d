pub mod beats;
pub mod decode;
pub mod onset;
