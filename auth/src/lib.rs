// Authentication service: credential login/signup, password change, logout,
// and Google ID-token sign-in with just-in-time provisioning.

pub mod error;
pub mod handlers;
pub mod services;
