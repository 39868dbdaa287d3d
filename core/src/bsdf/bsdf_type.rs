//! Generalized BSDF Types

use bitflags::bitflags;

bitflags! {
    /// Components a generalized BSDF can sample or evaluate. Emitters use the
    /// direction flags so light and camera directions are sampled through the
    /// same interface as surface scattering.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BsdfType: u16 {
        const DIFFUSE_REFLECTION = 1 << 0;
        const DIFFUSE_TRANSMISSION = 1 << 1;
        const SPECULAR_REFLECTION = 1 << 2;
        const SPECULAR_TRANSMISSION = 1 << 3;
        const GLOSSY_REFLECTION = 1 << 4;
        const GLOSSY_TRANSMISSION = 1 << 5;
        const LIGHT_DIRECTION = 1 << 6;
        const EYE_DIRECTION = 1 << 7;

        const DIFFUSE = Self::DIFFUSE_REFLECTION.bits() | Self::DIFFUSE_TRANSMISSION.bits();
        const SPECULAR = Self::SPECULAR_REFLECTION.bits() | Self::SPECULAR_TRANSMISSION.bits();
        const GLOSSY = Self::GLOSSY_REFLECTION.bits() | Self::GLOSSY_TRANSMISSION.bits();
        const REFLECTION = Self::DIFFUSE_REFLECTION.bits()
            | Self::SPECULAR_REFLECTION.bits()
            | Self::GLOSSY_REFLECTION.bits();
        const TRANSMISSION = Self::DIFFUSE_TRANSMISSION.bits()
            | Self::SPECULAR_TRANSMISSION.bits()
            | Self::GLOSSY_TRANSMISSION.bits();
        const ALL_EMITTER = Self::LIGHT_DIRECTION.bits() | Self::EYE_DIRECTION.bits();
        const ALL_BSDF = Self::DIFFUSE.bits() | Self::SPECULAR.bits() | Self::GLOSSY.bits();
        const ALL = Self::ALL_EMITTER.bits() | Self::ALL_BSDF.bits();
    }
}

impl BsdfType {
    /// Tests whether any of the given flags is set.
    ///
    /// * `other` - Flags to match.
    pub fn matches(&self, other: Self) -> bool {
        self.intersects(other)
    }

    /// Returns true if every set component is specular.
    pub fn is_specular(&self) -> bool {
        !self.is_empty() && Self::SPECULAR.contains(*self)
    }
}
