use async_trait::async_trait;
use chrono::Utc;
use numisma_core::{
    CartItemId, CoinId, Email, EnrollmentId, OrderId, OrderItemId, OrderStatus, Price, ProfileId,
    ReviewId, Role, SubmissionId, SubmissionStatus, SubscriptionId, WishlistItemId,
};

use super::InMemoryBackend;
use crate::models::{
    CartItem, CoinListing, CoinReview, Enrollment, ListingFilters, ListingUpdate, NewCartItem,
    NewCoinListing, NewEnrollment, NewOrder, NewOrderItem, NewProfile, NewReview,
    NewVerificationSubmission, NewWishlistItem, NewsletterSubscription, Order, OrderItem, Page,
    PageRequest, Profile, ProfileUpdate, SubmissionReview, VerificationSubmission, WishlistItem,
};
use crate::repository::{
    CartRepository, EnrollmentRepository, ListingRepository, NewsletterRepository,
    OrderRepository, ProfileRepository, RepositoryError, ReviewRepository,
    VerificationRepository, WishlistRepository,
};

// =============================================================================
// Profiles
// =============================================================================

#[async_trait]
impl ProfileRepository for InMemoryBackend {
    async fn get(&self, id: ProfileId) -> Result<Option<Profile>, RepositoryError> {
        Ok(self.read()?.profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn get_by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError> {
        Ok(self
            .read()?
            .profiles
            .iter()
            .find(|p| p.email.as_ref() == Some(email))
            .cloned())
    }

    async fn create(&self, profile: &NewProfile) -> Result<Profile, RepositoryError> {
        let mut tables = self.write()?;
        if tables.profiles.iter().any(|p| p.id == profile.id) {
            return Err(RepositoryError::Conflict(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        let now = Utc::now();
        let created = Profile {
            id: profile.id,
            full_name: profile.full_name.clone(),
            email: profile.email.clone(),
            phone: profile.phone.clone(),
            avatar_url: profile.avatar_url.clone(),
            role: Role::default(),
            theme: numisma_core::Theme::default(),
            is_verified: false,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.profiles.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: ProfileId,
        update: &ProfileUpdate,
    ) -> Result<Profile, RepositoryError> {
        let mut tables = self.write()?;
        let profile = tables
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(RepositoryError::NotFound)?;

        if let Some(name) = &update.full_name {
            profile.full_name = Some(name.clone());
        }
        if let Some(phone) = &update.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(url) = &update.avatar_url {
            profile.avatar_url = Some(url.clone());
        }
        if let Some(theme) = update.theme {
            profile.theme = theme;
        }
        if let Some(role) = update.role {
            profile.role = role;
        }
        if let Some(verified) = update.is_verified {
            profile.is_verified = verified;
            profile.verified_at = verified.then(Utc::now);
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn list(
        &self,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<Page<Profile>, RepositoryError> {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let mut all: Vec<Profile> = self
            .read()?
            .profiles
            .iter()
            .filter(|p| {
                needle.as_ref().is_none_or(|n| {
                    p.full_name
                        .as_ref()
                        .is_some_and(|name| name.to_lowercase().contains(n))
                        || p.email.as_ref().is_some_and(|e| e.as_str().contains(n))
                })
            })
            .cloned()
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_all(all, page))
    }

    async fn count(&self, role: Option<Role>) -> Result<u64, RepositoryError> {
        Ok(self
            .read()?
            .profiles
            .iter()
            .filter(|p| role.is_none_or(|r| p.role == r))
            .count() as u64)
    }
}

// =============================================================================
// Listings
// =============================================================================

#[async_trait]
impl ListingRepository for InMemoryBackend {
    async fn list(
        &self,
        filters: &ListingFilters,
        page: PageRequest,
    ) -> Result<Page<CoinListing>, RepositoryError> {
        let mut all: Vec<CoinListing> = self
            .read()?
            .listings
            .iter()
            .filter(|l| filters.matches(l))
            .cloned()
            .collect();
        filters.sort(&mut all);
        Ok(Page::from_all(all, page))
    }

    async fn get(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError> {
        Ok(self.read()?.listings.iter().find(|l| l.id == id).cloned())
    }

    async fn get_fresh(&self, id: CoinId) -> Result<Option<CoinListing>, RepositoryError> {
        ListingRepository::get(self, id).await
    }

    async fn get_many(&self, ids: &[CoinId]) -> Result<Vec<CoinListing>, RepositoryError> {
        Ok(self
            .read()?
            .listings
            .iter()
            .filter(|l| ids.contains(&l.id))
            .cloned()
            .collect())
    }

    async fn create(&self, listing: &NewCoinListing) -> Result<CoinListing, RepositoryError> {
        let now = Utc::now();
        let created = CoinListing {
            id: CoinId::generate(),
            title: listing.title.clone(),
            description: listing.description.clone(),
            mint_date: listing.mint_date.clone(),
            region: listing.region.clone(),
            value: listing.value,
            rarity: listing.rarity,
            metal: listing.metal.clone(),
            dynasty: listing.dynasty.clone(),
            ruler: listing.ruler.clone(),
            condition: listing.condition.clone(),
            images: listing.images.clone(),
            stock_quantity: listing.stock_quantity,
            verified: false,
            seller_id: listing.seller_id,
            created_at: now,
            updated_at: now,
        };
        self.write()?.listings.push(created.clone());
        Ok(created)
    }

    async fn update(
        &self,
        id: CoinId,
        update: &ListingUpdate,
    ) -> Result<CoinListing, RepositoryError> {
        let mut tables = self.write()?;
        let listing = tables
            .listings
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(RepositoryError::NotFound)?;

        if let Some(title) = &update.title {
            listing.title.clone_from(title);
        }
        if let Some(description) = &update.description {
            listing.description = Some(description.clone());
        }
        if let Some(value) = update.value {
            listing.value = value;
        }
        if let Some(images) = &update.images {
            listing.images.clone_from(images);
        }
        if let Some(stock) = update.stock_quantity {
            listing.stock_quantity = stock;
        }
        if let Some(verified) = update.verified {
            listing.verified = verified;
        }
        listing.updated_at = Utc::now();
        Ok(listing.clone())
    }

    async fn list_all(&self, page: PageRequest) -> Result<Page<CoinListing>, RepositoryError> {
        let mut all = self.read()?.listings.clone();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(Page::from_all(all, page))
    }

    async fn count(&self, verified: Option<bool>) -> Result<u64, RepositoryError> {
        Ok(self
            .read()?
            .listings
            .iter()
            .filter(|l| verified.is_none_or(|v| l.verified == v))
            .count() as u64)
    }
}

// =============================================================================
// Cart
// =============================================================================

#[async_trait]
impl CartRepository for InMemoryBackend {
    async fn list(&self, user_id: ProfileId) -> Result<Vec<CartItem>, RepositoryError> {
        Ok(self
            .read()?
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .read()?
            .cart
            .iter()
            .find(|c| c.user_id == user_id && c.coin_id == coin_id)
            .cloned())
    }

    async fn insert(&self, item: &NewCartItem) -> Result<CartItem, RepositoryError> {
        let mut tables = self.write()?;
        if tables
            .cart
            .iter()
            .any(|c| c.user_id == item.user_id && c.coin_id == item.coin_id)
        {
            return Err(RepositoryError::Conflict(
                "duplicate key value violates unique constraint \"cart_items_user_id_coin_id_key\""
                    .to_string(),
            ));
        }
        let created = CartItem {
            id: CartItemId::generate(),
            user_id: item.user_id,
            coin_id: item.coin_id,
            quantity: item.quantity,
            created_at: Utc::now(),
        };
        tables.cart.push(created.clone());
        Ok(created)
    }

    async fn set_quantity(
        &self,
        id: CartItemId,
        quantity: u32,
    ) -> Result<CartItem, RepositoryError> {
        let mut tables = self.write()?;
        let item = tables
            .cart
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepositoryError::NotFound)?;
        item.quantity = quantity;
        Ok(item.clone())
    }

    async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<(), RepositoryError> {
        self.write()?
            .cart
            .retain(|c| !(c.user_id == user_id && c.coin_id == coin_id));
        Ok(())
    }

    async fn clear(&self, user_id: ProfileId) -> Result<(), RepositoryError> {
        self.check("cart.clear")?;
        self.write()?.cart.retain(|c| c.user_id != user_id);
        Ok(())
    }
}

// =============================================================================
// Wishlist
// =============================================================================

#[async_trait]
impl WishlistRepository for InMemoryBackend {
    async fn list(&self, user_id: ProfileId) -> Result<Vec<WishlistItem>, RepositoryError> {
        let mut items: Vec<WishlistItem> = self
            .read()?
            .wishlist
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        items.reverse();
        Ok(items)
    }

    async fn contains(&self, user_id: ProfileId, coin_id: CoinId) -> Result<bool, RepositoryError> {
        Ok(self
            .read()?
            .wishlist
            .iter()
            .any(|w| w.user_id == user_id && w.coin_id == coin_id))
    }

    async fn add(&self, item: &NewWishlistItem) -> Result<WishlistItem, RepositoryError> {
        let mut tables = self.write()?;
        if tables
            .wishlist
            .iter()
            .any(|w| w.user_id == item.user_id && w.coin_id == item.coin_id)
        {
            return Err(RepositoryError::Conflict(
                "coin already in wishlist".to_string(),
            ));
        }
        let created = WishlistItem {
            id: WishlistItemId::generate(),
            user_id: item.user_id,
            coin_id: item.coin_id,
            created_at: Utc::now(),
        };
        tables.wishlist.push(created.clone());
        Ok(created)
    }

    async fn remove(&self, user_id: ProfileId, coin_id: CoinId) -> Result<(), RepositoryError> {
        self.write()?
            .wishlist
            .retain(|w| !(w.user_id == user_id && w.coin_id == coin_id));
        Ok(())
    }
}

// =============================================================================
// Reviews
// =============================================================================

#[async_trait]
impl ReviewRepository for InMemoryBackend {
    async fn list_for_coin(&self, coin_id: CoinId) -> Result<Vec<CoinReview>, RepositoryError> {
        let mut reviews: Vec<CoinReview> = self
            .read()?
            .reviews
            .iter()
            .filter(|r| r.coin_id == coin_id)
            .cloned()
            .collect();
        reviews.reverse();
        Ok(reviews)
    }

    async fn create(&self, review: &NewReview) -> Result<CoinReview, RepositoryError> {
        let created = CoinReview {
            id: ReviewId::generate(),
            coin_id: review.coin_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        };
        self.write()?.reviews.push(created.clone());
        Ok(created)
    }

    async fn has_reviewed(
        &self,
        user_id: ProfileId,
        coin_id: CoinId,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .read()?
            .reviews
            .iter()
            .any(|r| r.user_id == user_id && r.coin_id == coin_id))
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.read()?.reviews.len() as u64)
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderRepository for InMemoryBackend {
    async fn create(&self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let now = Utc::now();
        let created = Order {
            id: OrderId::generate(),
            user_id: order.user_id,
            status: order.status,
            total: order.total,
            shipping_address: order.shipping_address.clone(),
            payment_reference: None,
            created_at: now,
            updated_at: now,
        };
        self.write()?.orders.push(created.clone());
        Ok(created)
    }

    async fn add_items(&self, items: &[NewOrderItem]) -> Result<Vec<OrderItem>, RepositoryError> {
        self.check("orders.add_items")?;
        let created: Vec<OrderItem> = items
            .iter()
            .map(|item| OrderItem {
                id: OrderItemId::generate(),
                order_id: item.order_id,
                coin_id: item.coin_id,
                title: item.title.clone(),
                price: item.price,
                quantity: item.quantity,
            })
            .collect();
        self.write()?.order_items.extend(created.iter().cloned());
        Ok(created)
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.read()?.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn items(&self, order_id: OrderId) -> Result<Vec<OrderItem>, RepositoryError> {
        Ok(self
            .read()?
            .order_items
            .iter()
            .filter(|i| i.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn list_for_user(&self, user_id: ProfileId) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .read()?
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.reverse();
        Ok(orders)
    }

    async fn list(
        &self,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> Result<Page<Order>, RepositoryError> {
        let mut all: Vec<Order> = self
            .read()?
            .orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        all.reverse();
        Ok(Page::from_all(all, page))
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, RepositoryError> {
        let mut tables = self.write()?;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn set_payment_reference(
        &self,
        id: OrderId,
        reference: &str,
    ) -> Result<Order, RepositoryError> {
        self.check("orders.set_payment_reference")?;
        let mut tables = self.write()?;
        let order = tables
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(RepositoryError::NotFound)?;
        order.payment_reference = Some(reference.to_string());
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn count(&self, status: Option<OrderStatus>) -> Result<u64, RepositoryError> {
        Ok(self
            .read()?
            .orders
            .iter()
            .filter(|o| status.is_none_or(|s| o.status == s))
            .count() as u64)
    }

    async fn revenue(&self) -> Result<Price, RepositoryError> {
        Ok(self
            .read()?
            .orders
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .map(|o| o.total)
            .sum())
    }
}

// =============================================================================
// Newsletter
// =============================================================================

#[async_trait]
impl NewsletterRepository for InMemoryBackend {
    async fn get(&self, email: &Email) -> Result<Option<NewsletterSubscription>, RepositoryError> {
        Ok(self
            .read()?
            .newsletter
            .iter()
            .find(|s| &s.email == email)
            .cloned())
    }

    async fn set_subscribed(
        &self,
        email: &Email,
        subscribed: bool,
    ) -> Result<NewsletterSubscription, RepositoryError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        if let Some(existing) = tables.newsletter.iter_mut().find(|s| &s.email == email) {
            existing.is_subscribed = subscribed;
            existing.updated_at = now;
            return Ok(existing.clone());
        }
        let created = NewsletterSubscription {
            id: SubscriptionId::generate(),
            email: email.clone(),
            is_subscribed: subscribed,
            created_at: now,
            updated_at: now,
        };
        tables.newsletter.push(created.clone());
        Ok(created)
    }

    async fn list(
        &self,
        subscribed_only: bool,
        page: PageRequest,
    ) -> Result<Page<NewsletterSubscription>, RepositoryError> {
        let mut all: Vec<NewsletterSubscription> = self
            .read()?
            .newsletter
            .iter()
            .filter(|s| !subscribed_only || s.is_subscribed)
            .cloned()
            .collect();
        all.reverse();
        Ok(Page::from_all(all, page))
    }

    async fn count_subscribed(&self) -> Result<u64, RepositoryError> {
        Ok(self
            .read()?
            .newsletter
            .iter()
            .filter(|s| s.is_subscribed)
            .count() as u64)
    }
}

// =============================================================================
// Verifications
// =============================================================================

#[async_trait]
impl VerificationRepository for InMemoryBackend {
    async fn create(
        &self,
        submission: &NewVerificationSubmission,
    ) -> Result<VerificationSubmission, RepositoryError> {
        let now = Utc::now();
        let created = VerificationSubmission {
            id: SubmissionId::generate(),
            user_id: submission.user_id,
            name: submission.name.clone(),
            phone: submission.phone.clone(),
            coin_count: submission.coin_count,
            total_coins: submission.total_coins,
            total_price: submission.total_price,
            coins: submission.coins.clone(),
            payment_reference: submission.payment_reference.clone(),
            status: submission.status,
            expert_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.write()?.verifications.push(created.clone());
        Ok(created)
    }

    async fn get(&self, id: SubmissionId) -> Result<Option<VerificationSubmission>, RepositoryError> {
        Ok(self
            .read()?
            .verifications
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: ProfileId,
    ) -> Result<Vec<VerificationSubmission>, RepositoryError> {
        let mut items: Vec<VerificationSubmission> = self
            .read()?
            .verifications
            .iter()
            .filter(|s| s.user_id == Some(user_id))
            .cloned()
            .collect();
        items.reverse();
        Ok(items)
    }

    async fn list(
        &self,
        status: Option<SubmissionStatus>,
        page: PageRequest,
    ) -> Result<Page<VerificationSubmission>, RepositoryError> {
        let all: Vec<VerificationSubmission> = self
            .read()?
            .verifications
            .iter()
            .filter(|s| status.is_none_or(|st| s.status == st))
            .cloned()
            .collect();
        Ok(Page::from_all(all, page))
    }

    async fn review(
        &self,
        id: SubmissionId,
        review: &SubmissionReview,
    ) -> Result<VerificationSubmission, RepositoryError> {
        let mut tables = self.write()?;
        let submission = tables
            .verifications
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(RepositoryError::NotFound)?;
        submission.status = review.status;
        submission.expert_notes.clone_from(&review.expert_notes);
        submission.updated_at = Utc::now();
        Ok(submission.clone())
    }

    async fn count(&self, status: Option<SubmissionStatus>) -> Result<u64, RepositoryError> {
        Ok(self
            .read()?
            .verifications
            .iter()
            .filter(|s| status.is_none_or(|st| s.status == st))
            .count() as u64)
    }
}

// =============================================================================
// Enrollments
// =============================================================================

#[async_trait]
impl EnrollmentRepository for InMemoryBackend {
    async fn enroll(&self, enrollment: &NewEnrollment) -> Result<Enrollment, RepositoryError> {
        let mut tables = self.write()?;
        if tables
            .enrollments
            .iter()
            .any(|e| e.user_id == enrollment.user_id && e.course_slug == enrollment.course_slug)
        {
            return Err(RepositoryError::Conflict("already enrolled".to_string()));
        }
        let created = Enrollment {
            id: EnrollmentId::generate(),
            user_id: enrollment.user_id,
            course_slug: enrollment.course_slug.clone(),
            enrolled_at: Utc::now(),
        };
        tables.enrollments.push(created.clone());
        Ok(created)
    }

    async fn list_for_user(&self, user_id: ProfileId) -> Result<Vec<Enrollment>, RepositoryError> {
        let mut items: Vec<Enrollment> = self
            .read()?
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        items.reverse();
        Ok(items)
    }

    async fn is_enrolled(
        &self,
        user_id: ProfileId,
        course_slug: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(self
            .read()?
            .enrollments
            .iter()
            .any(|e| e.user_id == user_id && e.course_slug == course_slug))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use numisma_core::{Rarity, Rating};

    use super::*;

    fn new_listing(title: &str, stock: u32) -> NewCoinListing {
        NewCoinListing {
            title: title.to_string(),
            description: None,
            mint_date: None,
            region: Some("India".to_string()),
            value: Price::new(100),
            rarity: Rarity::Common,
            metal: None,
            dynasty: None,
            ruler: None,
            condition: None,
            images: Vec::new(),
            stock_quantity: stock,
            seller_id: None,
        }
    }

    #[tokio::test]
    async fn test_zero_stock_excluded_from_browse() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        repos.listings.create(&new_listing("Rupee", 1)).await.unwrap();
        repos.listings.create(&new_listing("Anna", 0)).await.unwrap();

        let page = repos
            .listings
            .list(&ListingFilters::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.count, 1);
        assert_eq!(page.data[0].title, "Rupee");
        assert_eq!(repos.listings.count(None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cart_pair_is_unique() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let item = NewCartItem {
            user_id: ProfileId::generate(),
            coin_id: CoinId::generate(),
            quantity: 1,
        };
        repos.cart.insert(&item).await.unwrap();
        assert!(matches!(
            repos.cart.insert(&item).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_newsletter_toggle_keeps_row() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let email = Email::parse("a@b.co").unwrap();
        let first = repos.newsletter.set_subscribed(&email, true).await.unwrap();
        let second = repos.newsletter.set_subscribed(&email, false).await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(!second.is_subscribed);
        assert_eq!(repos.newsletter.count_subscribed().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revenue_skips_cancelled() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let address = crate::models::ShippingAddress {
            full_name: "A".to_string(),
            line1: "1 Road".to_string(),
            line2: None,
            city: "Pune".to_string(),
            state: "MH".to_string(),
            postal_code: "411001".to_string(),
            country: "India".to_string(),
            phone: numisma_core::PhoneNumber::parse("9876543210").unwrap(),
        };
        let user_id = ProfileId::generate();
        for total in [100, 50] {
            repos
                .orders
                .create(&NewOrder {
                    user_id,
                    status: OrderStatus::Pending,
                    total: Price::new(total),
                    shipping_address: address.clone(),
                })
                .await
                .unwrap();
        }
        let orders = repos.orders.list_for_user(user_id).await.unwrap();
        repos
            .orders
            .set_status(orders[0].id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(repos.orders.revenue().await.unwrap(), Price::new(100));
    }

    #[tokio::test]
    async fn test_reviews_allow_duplicates() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let review = NewReview {
            coin_id: CoinId::generate(),
            user_id: ProfileId::generate(),
            rating: Rating::new(4).unwrap(),
            comment: None,
        };
        assert!(!repos.reviews.has_reviewed(review.user_id, review.coin_id).await.unwrap());
        repos.reviews.create(&review).await.unwrap();
        repos.reviews.create(&review).await.unwrap();
        assert!(repos.reviews.has_reviewed(review.user_id, review.coin_id).await.unwrap());
        assert_eq!(repos.reviews.list_for_coin(review.coin_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_broken_operation_fails_until_restored() {
        let backend = InMemoryBackend::new();
        let repos = backend.repositories();
        let user_id = ProfileId::generate();
        repos
            .cart
            .insert(&NewCartItem {
                user_id,
                coin_id: CoinId::generate(),
                quantity: 1,
            })
            .await
            .unwrap();

        backend.break_operation("cart.clear");
        assert!(matches!(
            repos.cart.clear(user_id).await,
            Err(RepositoryError::Unavailable(_))
        ));
        assert_eq!(repos.cart.list(user_id).await.unwrap().len(), 1);

        backend.restore("cart.clear");
        repos.cart.clear(user_id).await.unwrap();
        assert!(repos.cart.list(user_id).await.unwrap().is_empty());
    }
}
