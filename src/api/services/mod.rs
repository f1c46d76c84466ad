pub mod redirect;

pub use redirect::{RedirectService, RedirectState, configure_redirect, redirect_routes};
