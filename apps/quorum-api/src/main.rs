use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = quorum_api::Args::parse();
	quorum_api::run(args).await
}
