use std::io::{self, BufRead, Write};

use crate::data::dataset::FeatureRange;
use crate::data::fuel::FuelCategory;
use crate::error::Result;

/// Ask for a number within `range`; an empty answer takes the mean.
pub fn get_bounded_input<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    range: &FeatureRange,
) -> Result<f64> {
    loop {
        write!(output, "{} {}: ", prompt, range)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(range.mean);
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(range.mean);
        }

        match line.parse::<f64>() {
            Ok(value) if range.contains(value) => return Ok(value),
            Ok(_) => writeln!(output, "Please enter a value between {:.2} and {:.2}", range.min, range.max)?,
            Err(_) => writeln!(output, "Please enter a valid number")?,
        }
    }
}

/// Ask for a fuel category by number or name.
pub fn get_fuel_input<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<FuelCategory> {
    loop {
        writeln!(output, "Choose your fuel type:")?;
        for category in FuelCategory::ALL {
            writeln!(output, "  {}. {}", category.index() + 1, category)?;
        }
        write!(output, "Fuel: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(FuelCategory::Essence);
        }
        let line = line.trim();

        let choice = line
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(FuelCategory::from_index)
            .or_else(|| line.parse::<FuelCategory>().ok());
        match choice {
            Some(category) => return Ok(category),
            None => writeln!(output, "Unknown fuel '{}'", line)?,
        }
    }
}

/// Stdin/stdout variant of [`get_bounded_input`].
pub fn prompt_bounded(prompt: &str, range: &FeatureRange) -> Result<f64> {
    get_bounded_input(&mut io::stdin().lock(), &mut io::stdout(), prompt, range)
}

pub fn prompt_fuel() -> Result<FuelCategory> {
    get_fuel_input(&mut io::stdin().lock(), &mut io::stdout())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> FeatureRange {
        FeatureRange { min: 2.0, max: 10.0, mean: 5.5 }
    }

    #[test]
    fn retries_until_valid() {
        let mut input = "abc\n42\n7.5\n".as_bytes();
        let mut output = Vec::new();
        let value = get_bounded_input(&mut input, &mut output, "Consumption", &range()).unwrap();
        assert_eq!(value, 7.5);
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("Please enter a valid number"));
        assert!(text.contains("between 2.00 and 10.00"));
    }

    #[test]
    fn empty_answer_takes_mean() {
        let mut input = "\n".as_bytes();
        let value = get_bounded_input(&mut input, &mut Vec::new(), "Mass", &range()).unwrap();
        assert_eq!(value, 5.5);
    }

    #[test]
    fn fuel_by_number_or_name() {
        let mut input = "4\n".as_bytes();
        assert_eq!(get_fuel_input(&mut input, &mut Vec::new()).unwrap(), FuelCategory::Gazole);
        let mut input = "kerosene\ngpl\n".as_bytes();
        assert_eq!(
            get_fuel_input(&mut input, &mut Vec::new()).unwrap(),
            FuelCategory::GazPetroleLiquefie
        );
    }
}
