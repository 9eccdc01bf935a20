/// The five independent key spaces a deployment shards separately (§4.1).
/// Each category has its own ring: a dataset UUID routes to the same
/// index for its runs as for its subruns only by coincidence, never by
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Dataset,
    Run,
    SubRun,
    Event,
    Product,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Dataset,
        Category::Run,
        Category::SubRun,
        Category::Event,
        Category::Product,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Dataset => "datasets",
            Category::Run => "runs",
            Category::SubRun => "subruns",
            Category::Event => "events",
            Category::Product => "products",
        }
    }
}
