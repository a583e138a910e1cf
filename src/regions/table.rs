use super::{MakeupKind, MakeupTypeConfig, SubRegion};
use crate::params::Bgr;

// Indices follow the 468 point face-mesh topology. "Left"/"right" name the
// side of the image, not of the subject, except for the eyebrows.

const UPPER_LIP: SubRegion = SubRegion {
    name: "upper_lip",
    edges: &[
        (61, 185),
        (185, 40),
        (40, 39),
        (39, 37),
        (37, 0),
        (0, 267),
        (267, 269),
        (269, 270),
        (270, 409),
        (409, 291),
        (291, 308),
        (308, 415),
        (415, 310),
        (310, 312),
        (312, 13),
        (13, 82),
        (82, 81),
        (81, 80),
        (80, 191),
        (191, 78),
    ],
};

const LOWER_LIP: SubRegion = SubRegion {
    name: "lower_lip",
    edges: &[
        (61, 146),
        (146, 91),
        (91, 181),
        (181, 84),
        (84, 17),
        (17, 314),
        (314, 405),
        (405, 321),
        (321, 375),
        (375, 291),
        (291, 308),
        (308, 324),
        (324, 402),
        (402, 317),
        (317, 14),
        (14, 87),
        (87, 178),
        (178, 88),
        (88, 95),
        (95, 78),
        (78, 61),
    ],
};

const LEFT_BLUSH: SubRegion = SubRegion {
    name: "left_blush",
    edges: &[
        (50, 205),
        (205, 187),
        (187, 123),
        (123, 117),
        (117, 118),
        (118, 101),
        (101, 36),
        (36, 205),
    ],
};

const RIGHT_BLUSH: SubRegion = SubRegion {
    name: "right_blush",
    edges: &[
        (280, 330),
        (330, 347),
        (347, 346),
        (346, 352),
        (352, 411),
        (411, 425),
        (425, 266),
    ],
};

const LEFT_EYEBROW: SubRegion = SubRegion {
    name: "left_eyebrow",
    edges: &[
        (276, 283),
        (283, 282),
        (282, 295),
        (295, 285),
        (300, 293),
        (293, 334),
        (334, 296),
        (296, 336),
    ],
};

const RIGHT_EYEBROW: SubRegion = SubRegion {
    name: "right_eyebrow",
    edges: &[
        (46, 53),
        (53, 52),
        (52, 65),
        (65, 55),
        (70, 63),
        (63, 105),
        (105, 66),
        (66, 107),
    ],
};

const FACE_OVAL: SubRegion = SubRegion {
    name: "face",
    edges: &[
        (10, 338),
        (338, 297),
        (297, 332),
        (332, 284),
        (284, 251),
        (251, 389),
        (389, 454),
        (454, 323),
        (323, 361),
        (361, 288),
        (288, 397),
        (397, 365),
        (365, 379),
        (379, 378),
        (378, 400),
        (400, 377),
        (377, 152),
        (152, 148),
        (148, 176),
        (176, 149),
        (149, 150),
        (150, 136),
        (136, 172),
        (172, 58),
        (58, 132),
        (132, 93),
        (93, 234),
        (234, 127),
        (127, 162),
        (162, 21),
        (21, 54),
        (54, 103),
        (103, 67),
        (67, 109),
        (109, 10),
    ],
};

const LEFT_EYELINER: SubRegion = SubRegion {
    name: "eyeliner",
    edges: &[
        (243, 112),
        (112, 26),
        (26, 22),
        (22, 23),
        (23, 24),
        (24, 110),
        (110, 25),
        (25, 226),
        (226, 130),
        (130, 33),
        (33, 7),
        (7, 163),
        (163, 144),
        (144, 145),
        (145, 153),
        (153, 154),
        (154, 155),
        (155, 133),
        (133, 243),
    ],
};

const RIGHT_EYELINER: SubRegion = SubRegion {
    name: "eyeliner",
    edges: &[
        (463, 362),
        (362, 382),
        (382, 381),
        (381, 380),
        (380, 374),
        (374, 373),
        (373, 390),
        (390, 249),
        (249, 263),
        (263, 359),
        (359, 446),
        (446, 255),
        (255, 339),
        (339, 254),
        (254, 253),
        (253, 252),
        (252, 256),
        (256, 341),
        (341, 463),
    ],
};

// Eye socket ring above the upper lid, closed along the lid line.
const LEFT_LID: SubRegion = SubRegion {
    name: "left_lid",
    edges: &[
        (226, 247),
        (247, 30),
        (30, 29),
        (29, 27),
        (27, 28),
        (28, 56),
        (56, 190),
        (190, 243),
        (243, 133),
        (133, 173),
        (173, 157),
        (157, 158),
        (158, 159),
        (159, 160),
        (160, 161),
        (161, 246),
        (246, 33),
        (33, 226),
    ],
};

const RIGHT_LID: SubRegion = SubRegion {
    name: "right_lid",
    edges: &[
        (446, 467),
        (467, 260),
        (260, 259),
        (259, 257),
        (257, 258),
        (258, 286),
        (286, 414),
        (414, 463),
        (463, 362),
        (362, 398),
        (398, 384),
        (384, 385),
        (385, 386),
        (386, 387),
        (387, 388),
        (388, 466),
        (466, 263),
        (263, 446),
    ],
};

// Eye apertures, cut out of the eyeshadow so the eyeball keeps its color.
const LEFT_EYE: SubRegion = SubRegion {
    name: "left_eye",
    edges: &[
        (33, 7),
        (7, 163),
        (163, 144),
        (144, 145),
        (145, 153),
        (153, 154),
        (154, 155),
        (155, 133),
        (133, 173),
        (173, 157),
        (157, 158),
        (158, 159),
        (159, 160),
        (160, 161),
        (161, 246),
        (246, 33),
    ],
};

const RIGHT_EYE: SubRegion = SubRegion {
    name: "right_eye",
    edges: &[
        (263, 249),
        (249, 390),
        (390, 373),
        (373, 374),
        (374, 380),
        (380, 381),
        (381, 382),
        (382, 362),
        (362, 398),
        (398, 384),
        (384, 385),
        (385, 386),
        (386, 387),
        (387, 388),
        (388, 466),
        (466, 263),
    ],
};

/// One entry per `MakeupKind`, in declaration order.
pub static TABLE: [MakeupTypeConfig; 8] = [
    MakeupTypeConfig {
        kind: MakeupKind::Foundation,
        subregions: &[FACE_OVAL],
        exclusions: &[],
        default_color: Bgr::new(128, 128, 128),
        default_intensity: 0.2,
    },
    MakeupTypeConfig {
        kind: MakeupKind::Blush,
        subregions: &[LEFT_BLUSH, RIGHT_BLUSH],
        exclusions: &[],
        default_color: Bgr::new(255, 0, 0),
        default_intensity: 0.2,
    },
    MakeupTypeConfig {
        kind: MakeupKind::Eyeshadow,
        subregions: &[LEFT_LID, RIGHT_LID],
        exclusions: &[LEFT_EYE, RIGHT_EYE],
        default_color: Bgr::new(128, 64, 96),
        default_intensity: 0.2,
    },
    MakeupTypeConfig {
        kind: MakeupKind::Eyebrow,
        subregions: &[LEFT_EYEBROW, RIGHT_EYEBROW],
        exclusions: &[],
        default_color: Bgr::new(0, 255, 0),
        default_intensity: 0.25,
    },
    MakeupTypeConfig {
        kind: MakeupKind::EyelinerLeft,
        subregions: &[LEFT_EYELINER],
        exclusions: &[],
        default_color: Bgr::new(0, 0, 0),
        default_intensity: 0.5,
    },
    MakeupTypeConfig {
        kind: MakeupKind::EyelinerRight,
        subregions: &[RIGHT_EYELINER],
        exclusions: &[],
        default_color: Bgr::new(0, 0, 0),
        default_intensity: 0.5,
    },
    MakeupTypeConfig {
        kind: MakeupKind::LipstickUpper,
        subregions: &[UPPER_LIP],
        exclusions: &[],
        default_color: Bgr::new(0, 0, 255),
        default_intensity: 0.2,
    },
    MakeupTypeConfig {
        kind: MakeupKind::LipstickLower,
        subregions: &[LOWER_LIP],
        exclusions: &[],
        default_color: Bgr::new(0, 0, 255),
        default_intensity: 0.2,
    },
];
