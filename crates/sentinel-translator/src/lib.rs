pub mod error;
pub mod free_client;
pub mod translator;

pub use error::{Result, TranslatorError};
pub use free_client::FreeTranslateClient;
pub use translator::Translator;
