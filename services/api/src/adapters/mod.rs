pub mod chat_llm;
pub mod db;
pub mod sst;

pub use chat_llm::OpenAiChatAdapter;
pub use db::DbAdapter;
pub use sst::OpenAiSstAdapter;
