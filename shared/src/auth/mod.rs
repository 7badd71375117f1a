/// Route access control.
///
/// Leaf-first: the token codec turns the raw cookie into claims, the role
/// matcher and rule table answer "may these claims see this path", and the
/// guard composes them into one decision per request.
pub mod guard;
pub mod roles;
pub mod rules;
pub mod session;
pub mod token;

pub use guard::{AccessGuard, Decision, canonical_path};
pub use roles::{RequiredRoles, default_dashboard, satisfies_any_role};
pub use rules::{RoleRule, RuleError, RuleTable};
pub use session::{bearer_authorization, embedded_user};
pub use token::{TokenCodec, TokenError, decode, normalize_token};
