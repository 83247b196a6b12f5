use crate::error::CliError;
use model::execution::report::LoadResult;

pub fn print_result(result: &LoadResult, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    for line in result.summary_lines() {
        println!("  {line}");
    }
    if let Some(breach) = &result.breach {
        println!("{breach}");
    }
    Ok(())
}

pub fn print_params(params: &[String]) {
    for line in params {
        println!("{line}");
    }
}
