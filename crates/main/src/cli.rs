use domain::{ChatRoom, Message, User};

pub const MENU: &str = "
Chat Application Menu:
1. List Users
2. List Rooms
3. Join Room
4. Leave Room
5. Exit
Enter your choice: ";

/// 退出聊天模式的输入
pub const EXIT_COMMAND: &str = "/exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    ListUsers,
    ListRooms,
    JoinRoom,
    LeaveRoom,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::ListUsers),
            "2" => Some(MenuChoice::ListRooms),
            "3" => Some(MenuChoice::JoinRoom),
            "4" => Some(MenuChoice::LeaveRoom),
            "5" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// `[username] - [RFC3339 时间]: content`
pub fn format_message(message: &Message) -> String {
    format!(
        "[{}] - [{}]: {}",
        message.username,
        message.timestamp.to_rfc3339(),
        message.content
    )
}

pub fn format_user(index: usize, user: &User) -> String {
    format!("{}. {} ({})", index + 1, user.username, user.status)
}

pub fn format_room(index: usize, room: &ChatRoom) -> String {
    format!(
        "{}. {} ({} members)",
        index + 1,
        room.name,
        room.members.len()
    )
}

/// 按从 1 开始的编号选择房间
pub fn pick_room<'a>(rooms: &'a [ChatRoom], input: &str) -> Option<&'a ChatRoom> {
    let index: usize = input.trim().parse().ok()?;
    index.checked_sub(1).and_then(|i| rooms.get(i))
}
