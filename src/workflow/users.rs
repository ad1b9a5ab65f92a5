//! 员工账号管理
//!
//! At least one Admin exists at all times: demotions and deletions of an
//! Admin are committed together with an `AtLeast(2)` guard over the Admin
//! count.

use serde_json::{json, Map, Value};

use crate::{
    database::{fetch, select, Bound, Document, Filter, Store, StoreError, Write},
    error::{CrmError, CrmResult},
    libs::{
        check_email, gen_id, now,
        password::{hash_password, verify_password},
        require,
    },
    model::{NewUser, User, UserPatch},
    perm::roles::{Actor, Role},
};

pub const SETUP_DONE: &str = "Initial setup already completed. Admin user exists. Use the admin panel or the create_admin command to create more admins.";
pub const EMAIL_TAKEN: &str = "User with this email already exists";
const LAST_ADMIN_ROLE: &str =
    "Cannot change the last admin's role. At least one admin must remain in the system.";
const LAST_ADMIN_DELETE: &str =
    "Cannot delete the last admin. At least one admin must remain in the system.";
pub const MIN_PASSWORD: usize = 6;

fn admins() -> Filter {
    Filter::all().eq("role", Role::Admin.as_str())
}

fn by_email(store: &dyn Store, email: &str) -> CrmResult<Option<User>> {
    Ok(select::<User>(store, &Filter::all().eq("email", email))?.pop())
}

fn new_user(draft: NewUser, role: Role) -> CrmResult<User> {
    let at = now();
    Ok(User {
        id: gen_id(),
        name: draft.name.trim().to_owned(),
        email: draft.email.trim().to_owned(),
        password: hash_password(&draft.password)?,
        role,
        created_at: at,
        updated_at: at,
    })
}

/// Inserts `user`, reporting a taken email with `taken`.
fn insert(store: &dyn Store, user: &User, taken: &str, mut batch: Vec<Write>) -> CrmResult<()> {
    if by_email(store, &user.email)?.is_some() {
        return Err(CrmError::validation(taken));
    }
    batch.push(Write::insert(user)?);
    store.apply(batch).map_err(|e| match e {
        StoreError::Duplicate(_) => CrmError::validation(taken),
        e => e.into(),
    })
}

/// Self service sign up, always as a Sales User.
pub fn register(store: &dyn Store, draft: NewUser) -> CrmResult<User> {
    require(
        &[draft.name.as_str(), draft.email.as_str(), draft.password.as_str()],
        "All fields are required",
    )?;
    check_email(&draft.email)?;
    let user = new_user(draft, Role::SalesUser)?;
    insert(store, &user, "User Already Exists", vec![])?;
    tracing::info!(user = %user.id, "user registered");
    Ok(user)
}

pub fn login(store: &dyn Store, email: &str, password: &str) -> CrmResult<User> {
    require(&[email, password], "All fields are required")?;
    match by_email(store, email.trim())? {
        Some(user) if verify_password(password, &user.password) => {
            tracing::info!(user = %user.id, "user logged in");
            Ok(user)
        }
        _ => Err(CrmError::Unauthenticated("Invalid credentials".into())),
    }
}

/// Creates the first Admin; refused once any Admin exists.
pub fn bootstrap_admin(store: &dyn Store, draft: NewUser) -> CrmResult<User> {
    if store.count(User::KIND, &admins())? > 0 {
        return Err(CrmError::forbidden(SETUP_DONE));
    }
    require(
        &[draft.name.as_str(), draft.email.as_str(), draft.password.as_str()],
        "Name, email, and password are required",
    )?;
    check_email(&draft.email)?;
    if draft.password.chars().count() < MIN_PASSWORD {
        return Err(CrmError::validation(format!(
            "Password must be at least {MIN_PASSWORD} characters"
        )));
    }
    let user = new_user(draft, Role::Admin)?;
    let guard = Write::expect::<User>(admins(), Bound::Zero, SETUP_DONE);
    insert(store, &user, EMAIL_TAKEN, vec![guard]).map_err(|e| match e {
        CrmError::InvalidState(msg) => CrmError::Forbidden(msg),
        e => e,
    })?;
    tracing::info!(user = %user.id, "first admin created");
    Ok(user)
}

pub fn list_users(store: &dyn Store) -> CrmResult<Vec<User>> {
    let mut users = select::<User>(store, &Filter::all())?;
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(users)
}

pub fn get_user(store: &dyn Store, id: &str) -> CrmResult<User> {
    fetch::<User>(store, id)?.ok_or_else(|| CrmError::not_found("User not found"))
}

pub fn create_user(store: &dyn Store, actor: &Actor, draft: NewUser) -> CrmResult<User> {
    require(
        &[draft.name.as_str(), draft.email.as_str(), draft.password.as_str()],
        "Name, email, and password are required",
    )?;
    check_email(&draft.email)?;
    let role = draft.role.unwrap_or_default();
    let user = new_user(draft, role)?;
    insert(store, &user, EMAIL_TAKEN, vec![])?;
    tracing::info!(user = %user.id, role = %user.role, actor = %actor.id, "user created");
    Ok(user)
}

pub fn update_user(store: &dyn Store, actor: &Actor, id: &str, patch: UserPatch) -> CrmResult<User> {
    let user = get_user(store, id)?;
    let role_change = patch.role.filter(|role| *role != user.role);
    if role_change.is_some() && actor.id == user.id {
        return Err(CrmError::invalid_state("You cannot change your own role"));
    }

    let mut set = Map::new();
    let mut batch = Vec::with_capacity(2);
    if let Some(name) = patch.name.filter(|n| !n.trim().is_empty()) {
        set.insert("name".into(), Value::String(name.trim().to_owned()));
    }
    if let Some(email) = patch.email.filter(|e| !e.trim().is_empty()) {
        let email = email.trim().to_owned();
        check_email(&email)?;
        if by_email(store, &email)?.is_some_and(|other| other.id != user.id) {
            return Err(CrmError::validation("Email already in use"));
        }
        set.insert("email".into(), Value::String(email));
    }
    if let Some(role) = role_change {
        if user.role == Role::Admin {
            if store.count(User::KIND, &admins())? <= 1 {
                return Err(CrmError::invalid_state(LAST_ADMIN_ROLE));
            }
            batch.push(Write::expect::<User>(admins(), Bound::AtLeast(2), LAST_ADMIN_ROLE));
        }
        set.insert("role".into(), json!(role));
    }
    if let Some(password) = patch.password.filter(|p| !p.is_empty()) {
        set.insert("password".into(), Value::String(hash_password(&password)?));
    }
    set.insert("updatedAt".into(), json!(now()));
    batch.push(Write::update::<User>(id, set));
    store.apply(batch).map_err(|e| match e {
        StoreError::Duplicate(_) => CrmError::validation("Email already in use"),
        e => e.into(),
    })?;
    if let Some(role) = role_change {
        tracing::info!(user = id, role = %role, actor = %actor.id, "user role changed");
    }
    get_user(store, id)
}

pub fn delete_user(store: &dyn Store, actor: &Actor, id: &str) -> CrmResult<User> {
    if actor.id == id {
        return Err(CrmError::invalid_state("You cannot delete your own account"));
    }
    let user = get_user(store, id)?;
    let mut batch = Vec::with_capacity(2);
    if user.role == Role::Admin {
        if store.count(User::KIND, &admins())? <= 1 {
            return Err(CrmError::invalid_state(LAST_ADMIN_DELETE));
        }
        batch.push(Write::expect::<User>(admins(), Bound::AtLeast(2), LAST_ADMIN_DELETE));
    }
    batch.push(Write::delete::<User>(id));
    store.apply(batch)?;
    tracing::info!(user = id, actor = %actor.id, "user deleted");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn draft(email: &str) -> NewUser {
        NewUser {
            name: "Sam".into(),
            email: email.into(),
            password: "secret1".into(),
            role: None,
        }
    }

    #[test]
    fn setup_runs_once() {
        let store = MemoryStore::new();
        let admin = bootstrap_admin(&store, draft("root@crm.com")).unwrap();
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(
            bootstrap_admin(&store, draft("other@crm.com")),
            Err(CrmError::forbidden(SETUP_DONE))
        );
        let mut short = draft("x@crm.com");
        short.password = "12345".into();
        let fresh = MemoryStore::new();
        assert!(matches!(bootstrap_admin(&fresh, short), Err(CrmError::Validation(_))));
    }

    #[test]
    fn register_never_grants_admin() {
        let store = MemoryStore::new();
        let mut d = draft("sam@crm.com");
        d.role = Some(Role::Admin);
        let user = register(&store, d).unwrap();
        assert_eq!(user.role, Role::SalesUser);
        assert_ne!(user.password, "secret1");
        assert_eq!(
            register(&store, draft("sam@crm.com")),
            Err(CrmError::validation("User Already Exists"))
        );
        assert!(login(&store, "sam@crm.com", "secret1").is_ok());
        assert_eq!(
            login(&store, "sam@crm.com", "wrong"),
            Err(CrmError::Unauthenticated("Invalid credentials".into()))
        );
    }

    #[test]
    fn last_admin_is_protected() {
        let store = MemoryStore::new();
        let root = bootstrap_admin(&store, draft("root@crm.com")).unwrap();
        let other = create_user(&store, &root.actor(), draft("two@crm.com")).unwrap();
        let demote = || UserPatch {
            role: Some(Role::SalesUser),
            ..Default::default()
        };

        // a second Admin deletes the first: allowed while two exist
        let promote = UserPatch {
            role: Some(Role::Admin),
            ..Default::default()
        };
        let second = update_user(&store, &root.actor(), &other.id, promote).unwrap();
        assert_eq!(second.role, Role::Admin);
        delete_user(&store, &second.actor(), &root.id).unwrap();

        // now `second` is the only Admin
        let third = create_user(&store, &second.actor(), draft("three@crm.com")).unwrap();
        assert_eq!(
            delete_user(&store, &Actor::new(third.id.clone(), Role::Admin), &second.id),
            Err(CrmError::invalid_state(LAST_ADMIN_DELETE))
        );
        assert_eq!(
            update_user(&store, &Actor::new(third.id.clone(), Role::Admin), &second.id, demote()),
            Err(CrmError::invalid_state(LAST_ADMIN_ROLE))
        );
        assert_eq!(
            update_user(&store, &second.actor(), &second.id, demote()),
            Err(CrmError::invalid_state("You cannot change your own role"))
        );
        assert_eq!(
            delete_user(&store, &second.actor(), &second.id),
            Err(CrmError::invalid_state("You cannot delete your own account"))
        );
    }

    #[test]
    fn emails_stay_unique_on_update() {
        let store = MemoryStore::new();
        let root = bootstrap_admin(&store, draft("root@crm.com")).unwrap();
        let other = create_user(&store, &root.actor(), draft("two@crm.com")).unwrap();
        let patch = UserPatch {
            email: Some("root@crm.com".into()),
            ..Default::default()
        };
        assert_eq!(
            update_user(&store, &root.actor(), &other.id, patch),
            Err(CrmError::validation("Email already in use"))
        );
        assert_eq!(list_users(&store).unwrap().len(), 2);
    }
}
