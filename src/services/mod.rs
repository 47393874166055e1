//! Services layer - Business logic
//!
//! Services enforce the rules of the site (who may edit or delete a post,
//! follow constraints, signup validation) and coordinate repositories,
//! the index cache and pagination. Handlers call services, never
//! repositories.

pub mod comment;
pub mod follow;
pub mod group;
pub mod media;
pub mod password;
pub mod post;
pub mod user;

pub use comment::{CommentService, CommentServiceError};
pub use follow::{FollowOutcome, FollowService, FollowServiceError};
pub use group::{is_valid_slug, GroupService};
pub use media::{MediaError, MediaStore};
pub use password::{hash_password, verify_password};
pub use post::{PostDraft, PostService, PostServiceError};
pub use user::{LoginInput, RegisterInput, UserService, UserServiceError};
