//! Data models
//!
//! Database entities (User, Session, Group, Post, Comment), the
//! joined views handed to templates, and the pagination helper.

mod comment;
mod group;
mod pagination;
mod post;
mod session;
mod user;

pub use comment::{Comment, CommentWithAuthor, CreateCommentInput};
pub use group::{Group, GroupRef, UpsertGroupInput};
pub use pagination::{paginate, parse_page_number, Page, PageWindow, Paginator};
pub use post::{AuthorRef, CreatePostInput, Post, PostFilter, PostWithMeta, UpdatePostInput};
pub use session::Session;
pub use user::{User, UserRole};
