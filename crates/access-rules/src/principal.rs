/// The actor a request is made on behalf of.
///
/// The engine never authenticates anyone; it only asks these three questions
/// of whatever identity layer the caller already has.
pub trait Principal {
    /// True when the request carries no authenticated identity.
    fn is_anonymous(&self) -> bool;

    /// The principal's user name. Compared case-insensitively by rules.
    fn name(&self) -> &str;

    /// Whether the principal belongs to `role`. Rules pass lowercase names.
    fn has_role(&self, role: &str) -> bool;
}

impl<P: Principal + ?Sized> Principal for &P {
    fn is_anonymous(&self) -> bool {
        (**self).is_anonymous()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn has_role(&self, role: &str) -> bool {
        (**self).has_role(role)
    }
}

/// A fixed principal: either anonymous, or a named user with a role list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPrincipal {
    name: Option<String>,
    roles: Vec<String>,
}

impl StaticPrincipal {
    /// An unauthenticated principal with no name and no roles.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated principal called `name`.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            roles: Vec::new(),
        }
    }

    /// Add role memberships, consuming and returning `self`.
    ///
    /// Role names are lowercased the same way rule facets are.
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.roles
            .extend(roles.into_iter().map(|r| r.as_ref().to_lowercase()));
        self
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

impl Principal for StaticPrincipal {
    fn is_anonymous(&self) -> bool {
        self.name.is_none()
    }

    fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    fn has_role(&self, role: &str) -> bool {
        let role = role.to_lowercase();
        self.roles.iter().any(|r| *r == role)
    }
}
