/// Parses the source text of a number literal.
pub fn parse_number(raw: &str) -> Option<f64> {
  let clean = raw.replace('_', "");
  if let Some(hex) = clean
    .strip_prefix("0x")
    .or_else(|| clean.strip_prefix("0X"))
  {
    return u64::from_str_radix(hex, 16).ok().map(|v| v as f64);
  }
  clean.parse::<f64>().ok()
}

/// Formats a number the way JavaScript's `String(n)` does for the values that matter in practice:
/// integers without a fraction, shortest round-trip decimals, and exponent notation outside
/// `[1e-6, 1e21)`.
pub fn format_number(value: f64) -> String {
  if value.is_nan() {
    return "NaN".into();
  }
  if value.is_infinite() {
    return if value > 0.0 { "Infinity" } else { "-Infinity" }.into();
  }
  if value == 0.0 {
    // Also covers negative zero.
    return "0".into();
  }
  let abs = value.abs();
  if abs >= 1e21 || abs < 1e-6 {
    let exp = format!("{:e}", value);
    return match exp.split_once('e') {
      Some((mantissa, power)) if !power.starts_with('-') => format!("{}e+{}", mantissa, power),
      _ => exp,
    };
  }
  if value.fract() == 0.0 {
    return format!("{:.0}", value);
  }
  format!("{}", value)
}

#[cfg(test)]
mod tests {
  use super::format_number;
  use super::parse_number;

  #[test]
  fn parses_literals() {
    assert_eq!(parse_number("0xff"), Some(255.0));
    assert_eq!(parse_number("1_000"), Some(1000.0));
    assert_eq!(parse_number(".5"), Some(0.5));
    assert_eq!(parse_number("2e3"), Some(2000.0));
    assert_eq!(parse_number("0x"), None);
  }

  #[test]
  fn formats_like_javascript() {
    assert_eq!(format_number(1.0), "1");
    assert_eq!(format_number(-0.0), "0");
    assert_eq!(format_number(0.5), "0.5");
    assert_eq!(format_number(-12.25), "-12.25");
    assert_eq!(format_number(1e21), "1e+21");
    assert_eq!(format_number(1e-7), "1e-7");
    assert_eq!(format_number(f64::NAN), "NaN");
    assert_eq!(format_number(f64::NEG_INFINITY), "-Infinity");
  }
}
