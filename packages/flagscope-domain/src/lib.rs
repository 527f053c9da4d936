pub mod filter;
pub mod query;
pub mod ranking;
pub mod search;

pub use filter::{
	Comparison, EnvironmentStatus, Predicate, SetFilter, SetMatch, StaleCondition, TagRef,
};
pub use query::{FilterField, FlagColumn, Operator, QueryParam, parse_operator_value};
pub use ranking::{PageWindow, RankExpr, RankSpec, RankTerm, SortColumn, SortKey, SortOrder};
pub use search::{FeatureSearchParams, SearchPlan};
