mod inputs;
mod repositories;

pub use inputs::{AssignRoleInput, CreateRoleInput, RegisterPermissionInput, SetOverrideInput};
pub use repositories::SecurityAdminRepository;
