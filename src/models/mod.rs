//! Shared API models: response envelope, pagination and user roles

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::order::Vertical;

/// User roles carried in access tokens
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Rider,
    Admin,
    GroceryAdmin,
    EcommerceAdmin,
    TaxiAdmin,
    PorterAdmin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Rider => "rider",
            UserRole::Admin => "admin",
            UserRole::GroceryAdmin => "grocery_admin",
            UserRole::EcommerceAdmin => "ecommerce_admin",
            UserRole::TaxiAdmin => "taxi_admin",
            UserRole::PorterAdmin => "porter_admin",
        }
    }

    /// `admin` runs every vertical, `{vertical}_admin` only its own
    pub fn administers(&self, vertical: Vertical) -> bool {
        matches!(
            (self, vertical),
            (UserRole::Admin, _)
                | (UserRole::GroceryAdmin, Vertical::Grocery)
                | (UserRole::EcommerceAdmin, Vertical::Ecommerce)
                | (UserRole::TaxiAdmin, Vertical::Taxi)
                | (UserRole::PorterAdmin, Vertical::Porter)
        )
    }

    /// Any administrative role
    pub fn is_admin(&self) -> bool {
        !matches!(self, UserRole::Customer | UserRole::Rider)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" | "user" => Ok(UserRole::Customer),
            "rider" => Ok(UserRole::Rider),
            "admin" => Ok(UserRole::Admin),
            "grocery_admin" => Ok(UserRole::GroceryAdmin),
            "ecommerce_admin" => Ok(UserRole::EcommerceAdmin),
            "taxi_admin" => Ok(UserRole::TaxiAdmin),
            "porter_admin" => Ok(UserRole::PorterAdmin),
            other => Err(format!("Unknown role: '{}'", other)),
        }
    }
}

/// API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            pagination: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }
}

/// Page metadata for list responses
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
}

impl Pagination {
    pub fn new(current_page: i64, items_per_page: i64, total_items: i64) -> Self {
        let total_pages = if items_per_page > 0 {
            (total_items + items_per_page - 1) / items_per_page
        } else {
            0
        };
        Self {
            current_page,
            total_pages,
            total_items,
            items_per_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_scope() {
        assert!(UserRole::Admin.administers(Vertical::Taxi));
        assert!(UserRole::PorterAdmin.administers(Vertical::Porter));
        assert!(!UserRole::PorterAdmin.administers(Vertical::Grocery));
        assert!(!UserRole::Rider.administers(Vertical::Grocery));
        assert!(!UserRole::Customer.is_admin());
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("ecommerce_admin".parse::<UserRole>(), Ok(UserRole::EcommerceAdmin));
        assert!("superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_pagination_math() {
        assert_eq!(Pagination::new(1, 20, 41).total_pages, 3);
        assert_eq!(Pagination::new(1, 20, 40).total_pages, 2);
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
    }

    #[test]
    fn test_envelope_skips_empty_fields() {
        let body = serde_json::to_value(ApiResponse::ok(1).with_message("done")).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "done");
        assert!(body.get("pagination").is_none());
        assert!(body.get("error").is_none());
    }
}
