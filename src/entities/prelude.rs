pub use super::videos::Entity as Videos;
