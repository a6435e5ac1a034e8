//! REST clients for the non-commerce vendors.
//!
//! # Services
//!
//! - `billing` - Subscription listing, pause and resume (OAuth client credentials)
//! - `cms` - Blog posts from the headless CMS
//! - `recipes` - Tag-based links between products and recipe posts
//! - `reviews` - Product reviews with request-shape fallbacks

pub mod billing;
pub mod cms;
pub mod recipes;
pub mod reviews;

pub use billing::{BillingClient, BillingError, Subscription};
pub use cms::{BlogPost, CmsClient, CmsError, PostPage};
pub use reviews::{NewReview, ReviewSummary, ReviewTarget, ReviewsClient, ReviewsError};
