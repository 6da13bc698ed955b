pub mod db;
pub mod exec;
pub mod genai;

pub use db::DbAdapter;
pub use exec::SubprocessExecAdapter;
pub use genai::OpenAiTextAdapter;
