//! Shopping cart seam. The payment flow only ever empties it.

/// The storefront cart
pub trait Cart: Send + Sync {
    /// Remove every item
    fn clear(&self);
}
