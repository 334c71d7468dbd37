//! medchat core library: chat session, completion client, quick menu and widget lifecycle
//! for the school health portal's chat panel.

pub mod chat;
pub mod config;
pub mod init;
pub mod llm;
pub mod markup;
pub mod primer;
pub mod quick_menu;
pub mod session;
pub mod widget;
