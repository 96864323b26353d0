//! Generates the Luxembourg festivities calendar and, optionally, the static site around it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use lux_core::{
    calendar::{build, BuildOptions},
    publish::{default_file_name, publish, write_calendar, SiteUrl},
    template::{TemplateFile, DEFAULT_TEMPLATE_PATH},
};

#[derive(Debug, Parser)]
#[command(
    version,
    about = "Generate an ICS calendar of Luxembourg holidays, festivities and fairs from editable templates"
)]
pub struct Arguments {
    /// first year to generate (inclusive)
    #[arg(long)]
    pub start_year: i32,
    /// last year to generate (inclusive), defaults to the start year
    #[arg(long)]
    pub end_year: Option<i32>,
    /// the editable template file
    #[arg(long, default_value = DEFAULT_TEMPLATE_PATH)]
    pub template: PathBuf,
    /// the calendar file to write, named after the year range by default
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// override the calendar name of the template
    #[arg(long)]
    pub calname: Option<String>,
    /// override the calendar description of the template
    #[arg(long)]
    pub caldesc: Option<String>,
    /// override the calendar PRODID of the template
    #[arg(long)]
    pub prodid: Option<String>,
    /// write the calendar together with its landing page into the site directory
    #[arg(long)]
    pub publish: bool,
    /// the site directory used with --publish
    #[arg(long, default_value = "site")]
    pub site_dir: PathBuf,
    /// the URL the site is served from, subscription links stay relative without it
    #[arg(long, env = "LUX_SITE_URL")]
    pub site_url: Option<SiteUrl>,
}

impl Arguments {
    fn end_year(&self) -> i32 {
        self.end_year.unwrap_or(self.start_year)
    }

    /// The calendar file name, also used for the published copy.
    fn file_name(&self) -> String {
        self.output
            .as_ref()
            .and_then(|output| output.file_name())
            .map(|file_name| file_name.to_string_lossy().into_owned())
            .unwrap_or_else(|| default_file_name(self.start_year, self.end_year()))
    }
}

impl From<&Arguments> for BuildOptions {
    fn from(value: &Arguments) -> Self {
        BuildOptions {
            start_year: value.start_year,
            end_year: value.end_year(),
            calname: value.calname.clone(),
            caldesc: value.caldesc.clone(),
            prodid: value.prodid.clone(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Arguments::parse();
    run(&args)
}

fn run(args: &Arguments) -> Result<()> {
    log::info!("reading templates from {}", args.template.display());
    let template = TemplateFile::load(&args.template)
        .with_context(|| format!("cannot use template {}", args.template.display()))?;
    let document = build(&template, &BuildOptions::from(args))?;

    if args.publish {
        let report = publish(
            &document,
            &args.site_dir,
            &args.file_name(),
            args.site_url.as_ref(),
        )?;
        match &report.links.webcal {
            Some(webcal) => log::info!("subscribe at {webcal}"),
            None => log::info!("subscription link is relative: {}", report.links.href),
        }
    } else {
        let path = args
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(args.file_name()));
        write_calendar(&document, &path)?;
    }
    Ok(())
}
