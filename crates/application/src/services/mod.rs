mod chat_service;

pub use chat_service::{ChatService, ChatServiceDependencies, ROOM_NOT_FOUND, SAVE_FAILED};
