//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docsift",
    version,
    author = "neur0map",
    about = "Cluster documents into categories and extract structured fields",
    long_about = "Docsift groups already-extracted document text into semantic clusters, names the \
                  resulting categories, proposes a field schema per category, and extracts and \
                  justifies field values with a text-generation service."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docsift/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Configuration profile to apply
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register plain-text files as documents
    Add {
        /// Files holding already-extracted text
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Treat each non-empty line as one spreadsheet row
        #[arg(long)]
        rows: bool,
    },

    /// List stored documents
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show one document with its fields and justifications
    Show {
        /// Document ID
        id: String,
    },

    /// Cluster documents and name the clusters
    Cluster {
        /// Restrict to these document IDs (defaults to all)
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<String>,

        /// Extra guidance for category naming
        #[arg(short, long)]
        instructions: Option<String>,
    },

    /// Set a document's category by hand
    Assign {
        /// Document ID
        id: String,

        /// Category name
        category: String,
    },

    /// Show documents grouped by category
    Categories,

    /// Classify uncategorized documents into existing categories
    Organize {
        /// Allowed category (repeatable; defaults to the current categories)
        #[arg(long = "category", value_name = "NAME")]
        categories: Vec<String>,

        /// Restrict to these document IDs (defaults to uncategorized documents)
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<String>,
    },

    /// Propose fields for one category
    Fields {
        /// Category name
        category: String,

        /// Number of fields wanted
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Extra guidance for the proposal
        #[arg(short, long)]
        instructions: Option<String>,

        /// Write the proposal into the catalog
        #[arg(long)]
        apply: bool,
    },

    /// Propose fields for every category
    FieldsAll {
        /// Number of fields wanted per category
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Extra guidance for the proposals
        #[arg(short, long)]
        instructions: Option<String>,

        /// Write the proposals into the catalog
        #[arg(long)]
        apply: bool,
    },

    /// Manage the field catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Describe catalog fields that have no description
    Describe,

    /// Extract catalog fields from categorized documents
    Extract {
        /// Restrict to these document IDs (defaults to all)
        #[arg(long = "id", value_name = "ID")]
        ids: Vec<String>,

        /// Extra guidance for extraction
        #[arg(short, long)]
        instructions: Option<String>,

        /// JSON file of category → field → description overrides
        #[arg(long, value_name = "FILE")]
        descriptions: Option<PathBuf>,
    },

    /// Find the passage supporting an extracted value
    Justify {
        /// Document ID
        id: String,

        /// Field name
        field: String,
    },

    /// Manage the text-generation API key
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },

    /// Delete all documents and the catalog (the API key is kept)
    Reset {
        /// Skip the confirmation guard
        #[arg(long)]
        yes: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CatalogAction {
    /// Print the catalog as JSON
    Show,

    /// Replace the catalog with a JSON file
    Import {
        file: PathBuf,
    },

    /// Write the catalog to a JSON file
    Export {
        file: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyAction {
    /// Store the API key
    Set {
        key: String,
    },

    /// Show the configured key, masked
    Show,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Commands {
    /// Subcommand name as typed on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Add { .. } => "add",
            Commands::List { .. } => "list",
            Commands::Show { .. } => "show",
            Commands::Cluster { .. } => "cluster",
            Commands::Assign { .. } => "assign",
            Commands::Categories => "categories",
            Commands::Organize { .. } => "organize",
            Commands::Fields { .. } => "fields",
            Commands::FieldsAll { .. } => "fields-all",
            Commands::Catalog { .. } => "catalog",
            Commands::Describe => "describe",
            Commands::Extract { .. } => "extract",
            Commands::Justify { .. } => "justify",
            Commands::ApiKey { .. } => "api-key",
            Commands::Reset { .. } => "reset",
            Commands::Config { .. } => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repeated_ids() {
        let cli = Cli::try_parse_from(["docsift", "extract", "--id", "a", "--id", "b", "-i", "dates ISO"]).unwrap();
        match cli.command {
            Commands::Extract { ids, instructions, .. } => {
                assert_eq!(ids, vec!["a", "b"]);
                assert_eq!(instructions.as_deref(), Some("dates ISO"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_command_name_matches_subcommand() {
        use clap::CommandFactory;
        let names: Vec<String> = Cli::command()
            .get_subcommands()
            .map(|c| c.get_name().to_string())
            .collect();

        for args in [
            vec!["docsift", "fields-all"],
            vec!["docsift", "api-key", "show"],
            vec!["docsift", "justify", "doc-1", "montant"],
            vec!["docsift", "categories"],
        ] {
            let cli = Cli::try_parse_from(&args).unwrap();
            assert_eq!(cli.command.name(), args[1]);
            assert!(names.iter().any(|n| n == cli.command.name()));
        }
    }
}
