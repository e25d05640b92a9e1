//! Per-entity records for every backend table.
//!
//! Each table has a validated model used by the application, plus a raw
//! `*Row` shape where the stored columns are looser than the model (free-text
//! email or phone, signed integers). Rows are converted at the repository
//! boundary; a row that fails validation is reported as
//! [`RepositoryError::DataCorruption`](crate::repository::RepositoryError).

pub mod cart;
pub mod enrollment;
pub mod listing;
pub mod newsletter;
pub mod order;
pub mod page;
pub mod profile;
pub mod review;
pub mod verification;
pub mod wishlist;

pub use cart::{CartItem, NewCartItem};
pub use enrollment::{Enrollment, NewEnrollment};
pub use listing::{CoinListing, ListingFilters, ListingSort, ListingUpdate, NewCoinListing};
pub use newsletter::NewsletterSubscription;
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems, ShippingAddress};
pub use page::{Page, PageRequest};
pub use profile::{NewProfile, Profile, ProfileUpdate};
pub use review::{CoinReview, NewReview};
pub use verification::{
    NewVerificationSubmission, SubmissionReview, SubmittedCoin, VerificationSubmission,
};
pub use wishlist::{NewWishlistItem, WishlistItem};

/// Table names.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const COIN_LISTINGS: &str = "coin_listings";
    pub const CART_ITEMS: &str = "cart_items";
    pub const WISHLIST_ITEMS: &str = "wishlist_items";
    pub const COIN_REVIEWS: &str = "coin_reviews";
    pub const ORDERS: &str = "orders";
    pub const ORDER_ITEMS: &str = "order_items";
    pub const NEWSLETTER_SUBSCRIPTIONS: &str = "newsletter_subscriptions";
    pub const VERIFICATION_SUBMISSIONS: &str = "verification_submissions";
    pub const COURSE_ENROLLMENTS: &str = "course_enrollments";
}
