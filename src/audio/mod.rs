pub mod amplify;
pub mod decode;
pub mod extract;
pub mod source;
