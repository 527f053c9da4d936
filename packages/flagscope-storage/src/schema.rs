/// Renders the bootstrap schema with every `\ir` include inlined.
pub fn render_schema() -> String {
	expand_includes(include_str!("../sql/init.sql"))
}

pub fn statements(sql: &str) -> Vec<&str> {
	sql.split(';').map(str::trim).filter(|statement| !statement.is_empty()).collect()
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		match line.trim().strip_prefix("\\ir ").map(str::trim) {
			Some(path) => out.push_str(include_for(path).unwrap_or(line)),
			None => out.push_str(line),
		}

		out.push('\n');
	}

	out
}

fn include_for(path: &str) -> Option<&'static str> {
	let sql = match path {
		"tables/001_environments.sql" => include_str!("../sql/tables/001_environments.sql"),
		"tables/002_users.sql" => include_str!("../sql/tables/002_users.sql"),
		"tables/003_features.sql" => include_str!("../sql/tables/003_features.sql"),
		"tables/004_feature_environments.sql" =>
			include_str!("../sql/tables/004_feature_environments.sql"),
		"tables/005_tags.sql" => include_str!("../sql/tables/005_tags.sql"),
		"tables/006_segments.sql" => include_str!("../sql/tables/006_segments.sql"),
		"tables/007_release_plans.sql" => include_str!("../sql/tables/007_release_plans.sql"),
		"tables/008_feature_strategies.sql" =>
			include_str!("../sql/tables/008_feature_strategies.sql"),
		"tables/009_favorite_features.sql" =>
			include_str!("../sql/tables/009_favorite_features.sql"),
		"tables/010_metrics.sql" => include_str!("../sql/tables/010_metrics.sql"),
		"tables/011_change_requests.sql" => include_str!("../sql/tables/011_change_requests.sql"),
		"tables/012_feature_lifecycles.sql" =>
			include_str!("../sql/tables/012_feature_lifecycles.sql"),
		"tables/013_dependent_features.sql" =>
			include_str!("../sql/tables/013_dependent_features.sql"),
		_ => return None,
	};

	Some(sql)
}
