use clap::{ArgAction, Parser};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "litshelf",
    version,
    about = "browse the Mississippi literacy book catalog from the terminal",
    long_about = "litshelf queries the literacy dashboard's books API, merges books listed under several grades, and pages through the result.\n\nExamples:\n  litshelf\n  litshelf -g 3 -g 4 --type fiction\n  litshelf --lexile-min 400 --lexile-max 800 -s lexile-desc -p 2\n  litshelf -b https://lit.example.org -o json\n\nTip: Use --init-config to write ~/.litshelf/config.yml and keep invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'o',
        long = "output-format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Page rendering: text or json."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'g',
        long = "grade",
        value_name = "GRADE",
        action = ArgAction::Append,
        help_heading = "Filters",
        help = "Grade to include (repeatable): K, 1-12, 3rd, or \"3rd Grade\"."
    )]
    pub grades: Vec<String>,

    #[arg(
        short = 't',
        long = "type",
        visible_alias = "literature-type",
        value_name = "TYPE",
        help_heading = "Filters",
        help = "Literature type: fiction or nonfiction."
    )]
    pub literature_type: Option<String>,

    #[arg(
        long = "lexile-min",
        value_name = "N",
        allow_hyphen_values = true,
        help_heading = "Filters",
        help = "Lowest lexile to include."
    )]
    pub lexile_min: Option<String>,

    #[arg(
        long = "lexile-max",
        value_name = "N",
        allow_hyphen_values = true,
        help_heading = "Filters",
        help = "Highest lexile to include."
    )]
    pub lexile_max: Option<String>,

    #[arg(
        short = 's',
        long = "sort",
        value_name = "FIELD-ORDER",
        help_heading = "View",
        help = "Ordering: title|author|grade|lexile|type with -asc or -desc (default title-asc)."
    )]
    pub sort: Option<String>,

    #[arg(
        short = 'p',
        long = "page",
        value_name = "N",
        help_heading = "View",
        help = "Page to show (20 books per page)."
    )]
    pub page: Option<usize>,

    #[arg(
        short = 'a',
        long = "all-pages",
        help_heading = "View",
        help = "Print every page in turn."
    )]
    pub all_pages: bool,

    #[arg(
        short = 'b',
        long = "base-url",
        visible_alias = "api",
        value_name = "URL",
        help_heading = "Connection",
        help = "Books API origin (default http://127.0.0.1:5000)."
    )]
    pub base_url: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECS",
        help_heading = "Connection",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "limit",
        value_name = "N",
        help_heading = "Connection",
        help = "Row cap sent with each request (0 = omit, default 500)."
    )]
    pub limit: Option<u32>,

    #[arg(
        short = 'r',
        long = "rate",
        value_name = "RPS",
        help_heading = "Connection",
        help = "Request rate limit for multi-grade queries (0 = unpaced)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "proxy",
        value_name = "URL",
        help_heading = "Connection",
        help = "HTTP proxy for API requests."
    )]
    pub proxy: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        help_heading = "Config",
        help = "Path to config file (defaults to ~/.litshelf/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "init-config",
        help_heading = "Config",
        help = "Write a default config file if none exists, then exit."
    )]
    pub init_config: bool,
}
