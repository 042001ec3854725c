pub mod discovery;

pub use discovery::{discovery_page, results_fragment, DiscoveryVm, Results};
