use std::fmt;

use reqwest::Method;

/// Every backend call the console makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Login,
    Logout,
    ListUsers,
    CreateUser,
    ResetPassword,
    DeleteUser,
    ChangeDevice,
    ListDevices,
    GetDevice,
    CreateDevice,
    UpdateDevice,
    DeleteDevice,
}

impl Operation {
    pub fn method(&self) -> Method {
        match self {
            Operation::Login | Operation::Logout | Operation::CreateUser | Operation::CreateDevice => {
                Method::POST
            }
            Operation::ListUsers | Operation::ListDevices | Operation::GetDevice => Method::GET,
            Operation::ResetPassword | Operation::ChangeDevice | Operation::UpdateDevice => {
                Method::PATCH
            }
            Operation::DeleteUser | Operation::DeleteDevice => Method::DELETE,
        }
    }

    /// Whether the session token is attached and a 401/403 ends the session
    pub fn requires_auth(&self) -> bool {
        !matches!(self, Operation::Login | Operation::Logout)
    }

    /// Message shown when the backend gives no message of its own
    pub fn fallback_message(&self) -> &'static str {
        match self {
            Operation::Login => "Không thể kết nối đến server",
            Operation::Logout => "Không thể đăng xuất",
            Operation::ListUsers => "Không thể lấy danh sách người dùng",
            Operation::CreateUser => "Không thể tạo người dùng",
            Operation::ResetPassword => "Không thể reset mật khẩu",
            Operation::DeleteUser => "Không thể xóa người dùng",
            Operation::ChangeDevice => "Không thể thay đổi thiết bị",
            Operation::ListDevices => "Không thể lấy danh sách thiết bị",
            Operation::GetDevice => "Không thể lấy thông tin thiết bị",
            Operation::CreateDevice => "Không thể tạo thiết bị",
            Operation::UpdateDevice => "Không thể cập nhật thiết bị",
            Operation::DeleteDevice => "Không thể xóa thiết bị",
        }
    }

    /// Message shown when the backend refused the call without saying why
    pub fn rejection_message(&self) -> &'static str {
        match self {
            Operation::Login => "Đăng nhập thất bại",
            other => other.fallback_message(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Login => "login",
            Operation::Logout => "logout",
            Operation::ListUsers => "list_users",
            Operation::CreateUser => "create_user",
            Operation::ResetPassword => "reset_password",
            Operation::DeleteUser => "delete_user",
            Operation::ChangeDevice => "change_device",
            Operation::ListDevices => "list_devices",
            Operation::GetDevice => "get_device",
            Operation::CreateDevice => "create_device",
            Operation::UpdateDevice => "update_device",
            Operation::DeleteDevice => "delete_device",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
