pub mod consumer;
pub mod dead_letter;
pub mod handler;

pub use consumer::IngestionConsumer;
pub use dead_letter::DeadLetterSink;
pub use handler::{Disposition, MessageHandler};
