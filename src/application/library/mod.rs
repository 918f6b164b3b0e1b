mod catalog_service;
mod dependencies;
mod errors;
mod loan_service;
mod member_service;
mod queries;

pub use catalog_service::{create_book, create_category, delete_book, delete_category, update_book};
pub use dependencies::ServiceDependencies;
pub use errors::{LibraryApplicationError, Result};
pub use loan_service::{borrow_book, return_loan};
pub use member_service::{create_member, delete_member};
pub use queries::{
    BookFilter, LoanView, MemberLoans, get_book, list_books, list_categories, list_loans,
    list_members, list_overdue_loans, member_loans,
};
