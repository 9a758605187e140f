//! Input validation utilities

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

use crate::models::{NewUser, UpdateUser};

/// Minimum age, in whole years, required to register
pub const MINIMUM_AGE: i32 = 13;

/// Validate a first or last name
pub fn validate_name(label: &str, value: &str) -> Result<(), String> {
    if value.trim().chars().count() < 2 {
        return Err(format!("{} debe tener al menos 2 caracteres", label));
    }
    Ok(())
}

/// Validate username; any characters are allowed once trimmed
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.trim().chars().count() < 3 {
        return Err("El nombre de usuario debe tener al menos 3 caracteres".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("El email es requerido".to_string());
    }

    if email.len() > 254 {
        return Err("El email es demasiado largo".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Formato de email inválido".to_string());
    }

    Ok(())
}

/// Validate password: at least 8 characters, one uppercase letter and one digit
pub fn validate_password(password: &str) -> Result<(), String> {
    let long_enough = password.chars().count() >= 8;
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());

    if !(long_enough && has_upper && has_digit) {
        return Err(
            "La contraseña debe tener al menos 8 caracteres, una mayúscula y un número".to_string(),
        );
    }

    Ok(())
}

/// Whole years elapsed between `birth` and `today`
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

/// Validate birth date against the minimum age
pub fn validate_birth_date(birth: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if birth > today {
        return Err("La fecha de nacimiento no puede estar en el futuro".to_string());
    }

    if age_on(birth, today) < MINIMUM_AGE {
        return Err(format!(
            "Debes ser mayor de {} años para registrarte",
            MINIMUM_AGE
        ));
    }

    Ok(())
}

/// Validate a registration payload (already normalized)
pub fn validate_new_user(user: &NewUser, today: NaiveDate) -> Result<(), String> {
    validate_name("El nombre", &user.nombre)?;
    validate_name("El apellido", &user.apellido)?;
    validate_email(&user.email)?;
    validate_username(&user.nombre_usuario)?;
    validate_password(&user.password)?;
    validate_birth_date(user.fecha_nacimiento, today)
}

/// Validate the fields present in a partial update
pub fn validate_update_user(update: &UpdateUser, today: NaiveDate) -> Result<(), String> {
    if let Some(nombre) = &update.nombre {
        validate_name("El nombre", nombre)?;
    }
    if let Some(apellido) = &update.apellido {
        validate_name("El apellido", apellido)?;
    }
    if let Some(email) = &update.email {
        validate_email(email)?;
    }
    if let Some(username) = &update.nombre_usuario {
        validate_username(username)?;
    }
    if let Some(birth) = update.fecha_nacimiento {
        validate_birth_date(birth, today)?;
    }
    Ok(())
}
