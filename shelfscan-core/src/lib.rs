pub mod category;
pub mod data;
pub mod error;
pub mod harvest;
pub mod model;
pub mod report;

pub use error::HarvestError;

pub fn banner() -> String {
    format!(
        r#"
   _____ __         __
  / ___// /_  ___  / /________________ _____
  \__ \/ __ \/ _ \/ / /_/ ___/ ___/ __ `/ __ \
 ___/ / / / /  __/ / __(__  ) /__/ /_/ / / / /
/____/_/ /_/\___/_/_/ /____/\___/\__,_/_/ /_/   v{}
"#,
        env!("CARGO_PKG_VERSION")
    )
}
