use clap::ValueEnum;

/// Who the assistant is talking to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
  Admin,
  Manager,
  Staff,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::Admin => "admin",
      Role::Manager => "manager",
      Role::Staff => "staff",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      Role::Admin => "Administrator",
      Role::Manager => "Inventory Manager",
      Role::Staff => "Staff Member",
    }
  }

  /// What the assistant may help this role with.
  pub fn capabilities(self) -> &'static str {
    match self {
      Role::Admin => {
        "The user has full access. You may discuss system health, user activity, \
         vendor contracts, valuation and any configuration change. Suggest \
         structural improvements when the data supports them."
      }
      Role::Manager => {
        "The user manages stock and purchasing. Focus on reorder decisions, \
         vendor performance, category trends and budget impact. Recommend \
         concrete purchase orders with quantities where possible."
      }
      Role::Staff => {
        "The user handles day-to-day stock. Keep answers short and practical: \
         what to restock, what expires soon and how to record movements. Refer \
         purchasing and vendor decisions to a manager."
      }
    }
  }
}

impl std::fmt::Display for Role {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

impl std::str::FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    <Role as ValueEnum>::from_str(s, true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_parse_role_case_insensitive() {
    assert_eq!("Manager".parse::<Role>(), Ok(Role::Manager));
    assert_eq!("staff".parse::<Role>(), Ok(Role::Staff));
    assert!("owner".parse::<Role>().is_err());
  }

  #[test]
  fn test_every_role_has_capabilities() {
    for role in Role::value_variants() {
      assert!(!role.capabilities().is_empty());
      assert_eq!(role.to_string(), role.as_str());
    }
  }
}
