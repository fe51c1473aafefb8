/// Hard upper bound for an image listing page size.
pub const MAX_LISTING_ELEMENTS: i32 = 100;

/// Upper bound of rows a single message store fetch may return.
pub const DEFAULT_MESSAGE_PAGE_SIZE: usize = 100;
