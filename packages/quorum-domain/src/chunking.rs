/// Splits source text into embeddable chunks, one per sentence.
pub fn split_chunks(input: &str) -> Vec<String> {
	input
		.trim()
		.split('.')
		.map(str::trim)
		.filter(|chunk| !chunk.is_empty())
		.map(ToString::to_string)
		.collect()
}
