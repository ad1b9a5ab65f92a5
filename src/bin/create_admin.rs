//! `create_admin [email] [password] [name]`
//!
//! Creates the first Admin account from the command line.

use sales_crm::{
    config::Config,
    database::MysqlStore,
    error::CrmError,
    model::NewUser,
    workflow::users::{bootstrap_admin, MIN_PASSWORD},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let email = args.next().unwrap_or_else(|| "admin@crm.com".into());
    let password = args.next().unwrap_or_else(|| "admin123".into());
    let name = args.next().unwrap_or_else(|| "Admin User".into());
    if password.chars().count() < MIN_PASSWORD {
        eprintln!("Password must be at least {MIN_PASSWORD} characters");
        std::process::exit(1);
    }

    let setting = Config::read()?;
    sales_crm::logging::init(&setting)?;
    let store = MysqlStore::connect(&setting.mysql_uri)?;
    let draft = NewUser {
        name,
        email,
        password,
        role: None,
    };
    match bootstrap_admin(&store, draft) {
        Ok(user) => {
            println!("Admin user created: {} <{}>", user.name, user.email);
            Ok(())
        }
        // 已有管理员或邮箱被占用时正常退出
        Err(CrmError::Forbidden(msg) | CrmError::Validation(msg)) => {
            println!("{msg}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
