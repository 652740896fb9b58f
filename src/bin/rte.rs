use anyhow::Result;
use richtext_editor::shell::serve;

#[tokio::main]
async fn main() -> Result<()> {
    serve().await
}
