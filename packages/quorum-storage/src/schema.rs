pub fn render_schema(vector_dim: u32) -> String {
	let init = include_str!("../../../sql/init.sql");
	let expanded = expand_includes(init);

	expanded.replace("<VECTOR_DIM>", &vector_dim.to_string())
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"00_extensions.sql" => out.push_str(include_str!("../../../sql/00_extensions.sql")),
				"tables/001_members.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_members.sql")),
				"tables/002_resources.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_resources.sql")),
				"tables/003_conversations.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_conversations.sql")),
				"tables/004_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_messages.sql")),
				"tables/005_knowledge_chunks.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_knowledge_chunks.sql")),
				"tables/006_access_requests.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_access_requests.sql")),
				"tables/007_grants.sql" =>
					out.push_str(include_str!("../../../sql/tables/007_grants.sql")),
				"tables/008_notifications.sql" =>
					out.push_str(include_str!("../../../sql/tables/008_notifications.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
