use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use scholarmail::{ContactInquiry, ContactMailer};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// scholarmail - deliver Scholar.name contact inquiries over SMTP
#[derive(Parser)]
#[command(name = "scholarmail")]
#[command(about = "Send a contact inquiry through the configured SMTP relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send the inquiry
    Send(InquiryArgs),
    /// Print the message that would be sent
    Preview(InquiryArgs),
}

#[derive(Args)]
struct InquiryArgs {
    /// Read the inquiry from a JSON file (web form field names)
    #[arg(long, conflicts_with_all = ["name", "email", "plan", "bio"])]
    json: Option<PathBuf>,

    #[arg(long, required_unless_present = "json")]
    name: Option<String>,

    #[arg(long, required_unless_present = "json")]
    email: Option<String>,

    /// Plan the submitter is interested in
    #[arg(long, required_unless_present = "json")]
    plan: Option<String>,

    /// Biography / context
    #[arg(long, required_unless_present = "json")]
    bio: Option<String>,

    #[arg(long)]
    institution: Option<String>,

    #[arg(long)]
    role: Option<String>,

    /// Research field
    #[arg(long)]
    field: Option<String>,

    #[arg(long)]
    openalex_id: Option<String>,

    /// Estimated number of profiles
    #[arg(long)]
    profiles: Option<String>,
}

impl InquiryArgs {
    fn into_inquiry(self) -> Result<ContactInquiry> {
        if let Some(path) = self.json {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return serde_json::from_str(&raw)
                .with_context(|| format!("Invalid inquiry in {}", path.display()));
        }

        Ok(ContactInquiry {
            full_name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            plan_interest: self.plan.unwrap_or_default(),
            biography: self.bio.unwrap_or_default(),
            institution: self.institution,
            role: self.role,
            research_field: self.field,
            openalex_id: self.openalex_id,
            estimated_profiles: self.profiles,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let mailer = ContactMailer::from_env()?;

    match cli.command {
        Commands::Send(args) => {
            let inquiry = args.into_inquiry()?;
            let receipt = mailer
                .send_contact_email(&inquiry)
                .await
                .context("Failed to send contact email")?;
            println!("{}", receipt.id);
        }
        Commands::Preview(args) => {
            let inquiry = args.into_inquiry()?;
            let message = mailer.prepare(&inquiry)?;
            print!("{}", message.render());
        }
    }

    Ok(())
}
