//! Info command - show system, provider and index status

use anyhow::Result;

use codesim::config::{self, Config, EmbeddingMode};
use codesim::embeddings::{create_provider, OllamaEmbedder};
use codesim::index::{index_path, Index};

pub async fn run(config: &Config) -> Result<()> {
    println!("codesim v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("System Information:");
    println!("  OS: {} {}", std::env::consts::OS, std::env::consts::ARCH);

    println!();
    println!("Configuration:");
    println!("  Config file: {}", config_file());

    println!();
    println!("Embeddings:");
    println!("  Mode: {}", mode_name(config.embeddings.mode));
    match create_provider(&config.embeddings) {
        Ok(provider) => println!("  Active: {}", provider.describe()),
        Err(e) => println!("  Active: none ({})", e),
    }
    check_local(config).await;
    check_key(&config.embeddings.remote.api_key_env);

    println!();
    println!("Index:");
    print_index_status(config);

    Ok(())
}

fn config_file() -> String {
    config::config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn mode_name(mode: EmbeddingMode) -> &'static str {
    match mode {
        EmbeddingMode::Hybrid => "hybrid",
        EmbeddingMode::Local => "local",
        EmbeddingMode::Remote => "remote",
    }
}

async fn check_local(config: &Config) {
    let local = &config.embeddings.local;
    if !local.enabled {
        println!("  Ollama: disabled");
        return;
    }

    let ollama = match OllamaEmbedder::new(local) {
        Ok(ollama) => ollama,
        Err(e) => {
            println!("  Ollama: {}", e);
            return;
        }
    };

    if !ollama.is_available().await {
        println!("  Ollama: not reachable at {}", ollama.base_url());
        return;
    }

    println!("  Ollama: running at {} (model {})", ollama.base_url(), ollama.model());
    if let Ok(models) = ollama.list_models().await {
        let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
        if !names.is_empty() {
            println!("  Installed models: {}", names.join(", "));
        }
    }
}

fn check_key(env_var: &str) {
    let status = match std::env::var(env_var) {
        Ok(v) if !v.is_empty() => "configured",
        _ => "not configured",
    };
    println!("  OpenAI ({}): {}", env_var, status);
}

fn print_index_status(config: &Config) {
    let Ok(root) = std::env::current_dir() else {
        println!("  Status: unknown working directory");
        return;
    };
    let path = index_path(&root, &config.index.directory);

    if !path.exists() {
        println!("  Status: not built (run `codesim index`)");
        return;
    }

    match Index::load(&path) {
        Ok(index) => {
            println!("  Path: {}", path.display());
            println!(
                "  Units: {} across {} files",
                index.len(),
                index.files().len()
            );
            println!("  Provider: {} ({} dims)", index.provider_name, index.dimension);
            println!(
                "  Built: {}{}",
                index.built_at.format("%Y-%m-%d %H:%M:%S UTC"),
                if index.complete { "" } else { " (partial)" }
            );
        }
        Err(e) => println!("  Status: unreadable ({})", e),
    }
}
