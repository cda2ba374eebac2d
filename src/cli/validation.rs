use crate::cli::args::CliArgs;
use crate::grade::Grade;
use crate::output::OutputFormat;
use crate::query::LiteratureType;
use crate::sorter::SortKey;

fn parse_lexile_arg(flag: &str, raw: &str) -> Result<Option<i32>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<i32>()
        .map(Some)
        .map_err(|_| format!("invalid {flag} '{raw}', expected an integer"))
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    for raw in args.grades.iter() {
        if !raw.trim().is_empty() && Grade::parse(raw).is_none() {
            return Err(format!("invalid --grade '{raw}', expected K or 1-12"));
        }
    }
    if let Some(raw) = args.literature_type.as_deref() {
        if !raw.trim().is_empty() && LiteratureType::parse(raw).is_none() {
            return Err(format!(
                "invalid --type '{raw}', expected fiction or nonfiction"
            ));
        }
    }
    let min = match args.lexile_min.as_deref() {
        Some(raw) => parse_lexile_arg("--lexile-min", raw)?,
        None => None,
    };
    let max = match args.lexile_max.as_deref() {
        Some(raw) => parse_lexile_arg("--lexile-max", raw)?,
        None => None,
    };
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(format!(
                "invalid lexile range, --lexile-min {min} is above --lexile-max {max}"
            ));
        }
    }
    if let Some(raw) = args.sort.as_deref() {
        raw.parse::<SortKey>()
            .map_err(|e| format!("invalid --sort '{raw}': {e}"))?;
    }
    if let Some(page) = args.page {
        if page == 0 {
            return Err("invalid page, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text or json"
            ));
        }
    }
    if let Some(raw) = args.base_url.as_deref() {
        crate::fetcher::parse_base_url(raw).map_err(|e| format!("invalid --base-url: {e}"))?;
    }
    Ok(())
}
