pub mod link;
pub mod resolver;

pub use link::RepositoryLink;
pub use resolver::RevisionUrlResolver;
