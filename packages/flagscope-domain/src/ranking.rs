const ENVIRONMENT_SORT_PREFIX: &str = "environment:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
	#[default]
	Asc,
	Desc,
}
impl SortOrder {
	pub fn parse(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"desc" => Self::Desc,
			_ => Self::Asc,
		}
	}

	pub fn as_sql(self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
	Name,
	Type,
	Stale,
	Project,
}
impl SortColumn {
	pub fn column(self) -> &'static str {
		match self {
			Self::Name => "features.name",
			Self::Type => "features.type",
			Self::Stale => "features.stale",
			Self::Project => "features.project",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
	Column(SortColumn),
	/// Enabled state of the named environment; flags without that environment sort last.
	Environment(String),
	LastSeenAt,
	CreatedAt,
}
impl SortKey {
	pub fn parse(raw: &str) -> Self {
		let raw = raw.trim();

		if let Some(environment) = raw.strip_prefix(ENVIRONMENT_SORT_PREFIX) {
			return Self::Environment(environment.to_string());
		}

		match raw {
			"name" => Self::Column(SortColumn::Name),
			"type" => Self::Column(SortColumn::Type),
			"stale" => Self::Column(SortColumn::Stale),
			"project" => Self::Column(SortColumn::Project),
			"lastSeenAt" => Self::LastSeenAt,
			_ => Self::CreatedAt,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankExpr {
	Favorite,
	Column(&'static str),
	EnvironmentEnabled(String),
	LastSeen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankTerm {
	pub expr: RankExpr,
	pub order: SortOrder,
	pub nulls_last: bool,
}
impl RankTerm {
	fn new(expr: RankExpr, order: SortOrder) -> Self {
		Self { expr, order, nulls_last: false }
	}

	fn nulls_last(expr: RankExpr, order: SortOrder) -> Self {
		Self { expr, order, nulls_last: true }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankSpec {
	pub favorites_first: bool,
	pub key: SortKey,
	pub order: SortOrder,
}
impl RankSpec {
	pub fn new(sort_by: &str, sort_order: &str, favorites_first: bool) -> Self {
		Self { favorites_first, key: SortKey::parse(sort_by), order: SortOrder::parse(sort_order) }
	}

	// Every key ends with the creation time and name tie-breaks.
	pub fn terms(&self) -> Vec<RankTerm> {
		let mut terms = Vec::with_capacity(5);

		if self.favorites_first {
			terms.push(RankTerm::new(RankExpr::Favorite, SortOrder::Desc));
		}

		match &self.key {
			SortKey::Column(column) => {
				terms.push(RankTerm::new(RankExpr::Column(column.column()), self.order));
				terms.push(RankTerm::new(RankExpr::Column("features.created_at"), SortOrder::Asc));
			},
			SortKey::Environment(environment) => {
				terms.push(RankTerm::nulls_last(
					RankExpr::EnvironmentEnabled(environment.clone()),
					self.order,
				));
				terms.push(RankTerm::new(RankExpr::Column("features.created_at"), SortOrder::Asc));
			},
			SortKey::LastSeenAt => {
				terms.push(RankTerm::nulls_last(RankExpr::LastSeen, self.order));
				terms.push(RankTerm::new(RankExpr::Column("features.created_at"), SortOrder::Asc));
			},
			SortKey::CreatedAt => {
				terms.push(RankTerm::new(RankExpr::Column("features.created_at"), self.order));
			},
		}

		terms.push(RankTerm::new(RankExpr::Column("features.name"), SortOrder::Asc));

		terms
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
	pub offset: u32,
	pub limit: u32,
}
impl PageWindow {
	pub fn new(offset: u32, limit: u32) -> Self {
		Self { offset, limit: limit.max(1) }
	}

	pub fn first_rank(self) -> i64 {
		i64::from(self.offset) + 1
	}

	pub fn last_rank(self) -> i64 {
		i64::from(self.offset) + i64::from(self.limit)
	}
}
